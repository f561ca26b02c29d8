use crate::certificate::random_serial_number;

/// **VALUE**: Verifies serial numbers are positive, non-zero-led, and wide enough.
///
/// **WHY THIS MATTERS**: DER integers are signed. A serial whose first bit is set encodes as a
/// negative number, which strict X.509 parsers reject. Fewer than 8 random bytes falls short of
/// 64 bits of entropy.
///
/// **BUG THIS CATCHES**: Would catch dropping the high-bit mask or shrinking the serial width.
#[test]
fn given_many_serials_when_generated_then_all_positive_and_distinct() {
    // GIVEN/WHEN: A batch of fresh serial numbers
    let serials: Vec<Vec<u8>> = (0..64)
        .map(|_| random_serial_number().expect("OS random source should be available"))
        .collect();

    // THEN: Every serial is 9 bytes with a clear sign bit and a non-zero lead byte
    for serial in &serials {
        assert_eq!(serial.len(), 9);
        assert_eq!(serial[0] & 0x80, 0, "Sign bit must be clear");
        assert_ne!(serial[0], 0, "Lead byte must be non-zero");
    }

    // AND: No two serials collide
    let mut unique = serials.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), serials.len(), "Serials should be unique");
}
