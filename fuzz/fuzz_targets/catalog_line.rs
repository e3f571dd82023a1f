#![no_main]

use libfuzzer_sys::fuzz_target;
use shelfmatch_core::{ProductRecord, RawProduct};

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = serde_json::from_slice::<RawProduct>(data) else {
        return;
    };
    let record = ProductRecord::from_raw(raw);

    let line = serde_json::to_string(&record).expect("records serialize");
    let back: ProductRecord = serde_json::from_str(&line).expect("processed lines parse");
    assert_eq!(back.product_id, record.product_id);
    assert_eq!(back.searchable_text, record.searchable_text);
    assert_eq!(back.metadata(), record.metadata());
});
