#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, u8, u16)| {
    let (digest, probe_count, counter_count) = input;
    if counter_count == 0 {
        return;
    }
    let (probe_count, counter_count) = (probe_count as u64, counter_count as u64);
    let probes = cbfilter::Probes::new(digest, probe_count, counter_count);
    assert_eq!(probes.len() as u64, probe_count);
    let (low, high) = (digest >> 32, digest & 0xFFFF_FFFF);
    for (i, index) in probes.enumerate() {
        let i = i as u64;
        assert!((index as u64) < counter_count);
        assert_eq!(index as u64, (low + i * high) % counter_count);
    }
    let f = cbfilter::Filter8::with_params(probe_count, counter_count).unwrap();
    let est = f.add_digest(digest);
    assert_eq!(est, f.count_digest(digest));
    assert!(est >= 1 || probe_count == 0);
    f.reset_digest(digest);
    assert_eq!(f.count_digest(digest), if probe_count == 0 { 255 } else { 0 });
});
