//! Fingerprint display for out-of-band key verification.

use sealchat::crypto::Fingerprint;

/// Render a fingerprint as hex, grouped hex and random art.
///
/// Both users read these lines to each other (phone call, in person) to
/// detect a man in the middle.
pub fn fingerprint_lines(label: &str, fingerprint: &Fingerprint) -> Vec<String> {
    let [first, second] = fingerprint.grouped();

    let mut lines = vec![
        format!("{} fingerprint (SHA-256):", label),
        format!("  {}", fingerprint.to_hex()),
        String::new(),
        format!("  {}", first),
        format!("  {}", second),
        String::new(),
    ];
    lines.extend(fingerprint.randomart().into_iter().map(|row| format!("  {}", row)));
    lines
}

/// Print a fingerprint block to stdout.
pub fn print_fingerprint(label: &str, fingerprint: &Fingerprint) {
    for line in fingerprint_lines(label, fingerprint) {
        println!("{}", line);
    }
}
