//! Answers to a transfer offer

use derive_more::Display;

/// Result of offering a message to a router
///
/// Refusals are normal control flow: the sender reacts to them but they
/// are never reported as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ReceiveCode {
    #[display("OK")]
    Ok,
    /// Receiver is busy with another transfer
    #[display("TRY_LATER_BUSY")]
    TryLaterBusy,
    /// Receiver already has the message or has already delivered it
    #[display("DENIED_OLD")]
    DeniedOld,
    #[display("DENIED_NO_SPACE")]
    DeniedNoSpace,
    #[display("DENIED_TTL")]
    DeniedTtl,
    /// Message already reached its destination; the sender should drop it
    #[display("DENIED_DELIVERED")]
    DeniedDelivered,
    /// Receiver is inside the message's virtual repository and already holds it
    #[display("DENIED_ALREADY_IN_VR")]
    DeniedAlreadyInVr,
    /// Check-in offered back to its own originator
    #[display("DENIED_CHECKIN")]
    DeniedCheckIn,
    #[display("DENIED_UNSPECIFIED")]
    DeniedUnspecified,
}

impl ReceiveCode {
    /// Numeric code: zero accepts, positive asks to retry, negative refuses
    pub fn code(self) -> i32 {
        match self {
            ReceiveCode::Ok => 0,
            ReceiveCode::TryLaterBusy => 1,
            ReceiveCode::DeniedOld => -1,
            ReceiveCode::DeniedNoSpace => -2,
            ReceiveCode::DeniedTtl => -3,
            ReceiveCode::DeniedDelivered => -5,
            ReceiveCode::DeniedAlreadyInVr => -6,
            ReceiveCode::DeniedCheckIn => -7,
            ReceiveCode::DeniedUnspecified => -99,
        }
    }

    pub fn is_ok(self) -> bool {
        self == ReceiveCode::Ok
    }

    /// The offer may succeed later on the same connection
    pub fn is_try_later(self) -> bool {
        self.code() > 0
    }

    pub fn is_denied(self) -> bool {
        self.code() < 0
    }
}
