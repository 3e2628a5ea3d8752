use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER : AtomicUsize = AtomicUsize::new(0);

/// Generates a process-wide unique name with the informed prefix.
pub fn generate_name(prefix : &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}_{}", prefix, n)
}

/// Returns base if it is not taken; otherwise the first of base_1, base_2...
/// that is not taken.
pub fn unique_name<F>(base : &str, taken : F) -> String
where
    F : Fn(&str) -> bool
{
    if !taken(base) {
        return base.to_string();
    }
    let mut i = 1;
    loop {
        let candidate = format!("{}_{}", base, i);
        if !taken(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

#[test]
fn generated_names_differ() {
    assert_ne!(generate_name("model"), generate_name("model"));
}

#[test]
fn unique_name_skips_taken() {
    let taken = ["Add", "Add_1"];
    assert_eq!(unique_name("Add", |n| taken.contains(&n)), "Add_2");
    assert_eq!(unique_name("Mul", |n| taken.contains(&n)), "Mul");
}
