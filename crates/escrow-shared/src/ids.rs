//! Display references built from sequence numbers.
//!
//! Values wider than the pad width are printed in full, never truncated.

pub fn escrow_reference(sequence: i64) -> String {
    format!("PO-{sequence:04}")
}

pub fn dispute_reference(sequence: i64) -> String {
    format!("DSP-{sequence:04}")
}

pub fn timeline_id(sequence: i64) -> String {
    format!("tl-{sequence}")
}

pub fn user_id(sequence: i64) -> String {
    format!("usr_{sequence}")
}

pub fn notification_id(sequence: i64) -> String {
    format!("notif-{sequence:02}")
}
