use super::*;

#[test]
fn test_format_number_comma() {
    let options = NumberFormatOptions {
        use_comma: true,
        use_human: false,
        locale: "en".to_string(),
        decimal_places: 2,
    };

    assert_eq!(format_number(1000u64, &options), "1,000");
    assert_eq!(format_number(1000000u64, &options), "1,000,000");
    assert_eq!(format_number(123u64, &options), "123");
}

#[test]
fn test_format_number_human() {
    let options = NumberFormatOptions {
        use_comma: false,
        use_human: true,
        locale: "en".to_string(),
        decimal_places: 1,
    };

    assert_eq!(format_number(100u64, &options), "100");
    assert_eq!(format_number(1500u64, &options), "1.5k");
    assert_eq!(format_number(1_500_000u64, &options), "1.5m");
    assert_eq!(format_number(1_500_000_000u64, &options), "1.5b");
    assert_eq!(format_number(1_500_000_000_000u64, &options), "1.5t");
}

#[test]
fn test_format_number_plain() {
    let options = NumberFormatOptions {
        use_comma: false,
        use_human: false,
        locale: "en".to_string(),
        decimal_places: 2,
    };

    assert_eq!(format_number(1234567u64, &options), "1234567");
}

#[test]
fn test_format_number_locale() {
    let options = NumberFormatOptions {
        use_comma: true,
        use_human: false,
        locale: "de".to_string(),
        decimal_places: 2,
    };

    assert_eq!(format_number(1234567u64, &options), "1.234.567");
}

#[test]
fn test_format_date_for_display() {
    assert_eq!(format_date_for_display("2024-01-05"), "1/5/2024");
    assert_eq!(format_date_for_display("unknown"), "Unknown");
    assert_eq!(format_date_for_display("garbage"), "garbage");

    // Today's date gets a trailing marker.
    let today = chrono::Local::now().date_naive();
    let formatted = format_date_for_display(&today.format("%Y-%m-%d").to_string());
    assert!(formatted.ends_with('*'));
}

#[test]
fn test_hash_text_stable() {
    let a = hash_text("prompt:2024-01-01T10:00:00Z");
    let b = hash_text("prompt:2024-01-01T10:00:00Z");
    let c = hash_text("prompt:2024-01-01T10:00:01Z");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.len(), 64); // full sha256 hex
}

#[test]
fn test_fast_hash_differs_on_content() {
    assert_eq!(fast_hash(b"abc"), fast_hash(b"abc"));
    assert_ne!(fast_hash(b"abc"), fast_hash(b"abd"));
}
