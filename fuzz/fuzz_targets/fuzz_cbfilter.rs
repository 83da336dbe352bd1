#![no_main]
use libfuzzer_sys::arbitrary;
use libfuzzer_sys::arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

const CHECK_EVERY: usize = 8;
// At most 19 probes per add (fp 1e-6), keeps every counter below u16::MAX.
const MAX_OPS: usize = 3_000;

#[derive(Debug, Arbitrary)]
struct Input {
    cap: u16,
    fp_exp: u8,
    ops: Vec<(u8, u16)>,
}

fuzz_target!(|input: Input| {
    let Input { cap, fp_exp, ops } = input;
    let fp = (0.1f64).powi(fp_exp.clamp(1, 6) as i32);
    let Ok(f) = cbfilter::Filter16::new(cap as u64, fp) else {
        return;
    };
    // The "Model", tracks the count for each item
    let mut counts = vec![0u64; (u16::MAX as usize) + 1];
    for (i, &(op, item)) in ops.iter().take(MAX_OPS).enumerate() {
        let key = item.to_le_bytes();
        match op % 4 {
            0 | 1 => {
                let est = f.add(key);
                counts[item as usize] += 1;
                assert!(est >= counts[item as usize]);
            }
            2 if counts[item as usize] != 0 => {
                let est = f.remove(key);
                counts[item as usize] -= 1;
                assert!(est >= counts[item as usize]);
            }
            3 if op % 64 == 3 => {
                f.reset(key);
                assert_eq!(f.count(key), 0);
                // every value sharing a counter may have lost counts
                for count in counts.iter_mut() {
                    *count = 0;
                }
            }
            _ => continue,
        }
        if i % CHECK_EVERY == 0 {
            for &(_op, e) in &ops[..=i] {
                let est = f.count(e.to_le_bytes());
                let min = counts[e as usize];
                assert!(est >= min, "{}: est {} min {}", e, est, min);
            }
        }
    }
    let snapshot = f.snapshot();
    let restored = cbfilter::Filter16::from_snapshot(&snapshot).unwrap();
    for &(_op, e) in &ops {
        let est = f.count(e.to_le_bytes());
        assert_eq!(restored.count(e.to_le_bytes()), est);
        assert!(est >= counts[e as usize], "{}: est {} min {}", e, est, counts[e as usize]);
    }
    f.clear();
    assert!(f.snapshot().counters().all(|c| c == 0));
});
