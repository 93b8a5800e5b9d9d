//! UDS Negative Response Codes (NRC)
//!
//! One closed table shared by every service. Each code carries the fixed
//! description that gets logged whenever the code is sent.

use std::fmt;

macro_rules! negative_response_codes {
    ($( $(#[$meta:meta])* $variant:ident = $code:literal => $description:literal, )+) => {
        /// UDS Negative Response Codes (NRC)
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NegativeResponseCode {
            $( $(#[$meta])* $variant, )+
            /// Code outside the known table, sent through unchanged
            Unknown(u8),
        }

        impl From<u8> for NegativeResponseCode {
            fn from(value: u8) -> Self {
                match value {
                    $( $code => Self::$variant, )+
                    other => Self::Unknown(other),
                }
            }
        }

        impl From<NegativeResponseCode> for u8 {
            fn from(nrc: NegativeResponseCode) -> Self {
                match nrc {
                    $( NegativeResponseCode::$variant => $code, )+
                    NegativeResponseCode::Unknown(v) => v,
                }
            }
        }

        impl NegativeResponseCode {
            /// Human-readable description, `None` for codes outside the table
            pub fn description(&self) -> Option<&'static str> {
                match self {
                    $( Self::$variant => Some($description), )+
                    Self::Unknown(_) => None,
                }
            }
        }

        impl fmt::Display for NegativeResponseCode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( Self::$variant => f.write_str(stringify!($variant)), )+
                    Self::Unknown(v) => write!(f, "Unknown(0x{:02X})", v),
                }
            }
        }
    };
}

negative_response_codes! {
    // General NRCs
    GeneralReject = 0x10 => "General reject",
    ServiceNotSupported = 0x11 => "Service not supported",
    SubFunctionNotSupported = 0x12 => "Sub-function not supported",
    IncorrectMessageLengthOrFormat = 0x13 => "Incorrect message length or invalid format",
    ResponseTooLong = 0x14 => "Response too long",

    // Condition NRCs
    ConditionsNotCorrect = 0x22 => "Conditions not correct",

    // Sequence NRCs
    RequestSequenceError = 0x24 => "Request sequence error",
    NoResponseFromSubnet = 0x25 => "No response from subnet component",

    // Request NRCs
    RequestOutOfRange = 0x31 => "Request out of range",
    SecurityAccessDenied = 0x33 => "Security access denied",
    AuthenticationRequired = 0x34 => "Authentication required",
    InvalidKey = 0x35 => "Invalid key",
    ExceededNumberOfAttempts = 0x36 => "Exceeded number of attempts",
    RequiredTimeDelayNotExpired = 0x37 => "Required time delay not expired",

    // Upload/Download NRCs
    UploadDownloadNotAccepted = 0x70 => "Upload download not accepted",
    TransferDataSuspended = 0x71 => "Transfer data suspended",
    GeneralProgrammingFailure = 0x72 => "General programming failure",
    WrongBlockSequenceCounter = 0x73 => "Wrong block sequence counter",

    /// Request correctly received, response pending
    ResponsePending = 0x78 => "Request correctly received-response pending",

    // Session NRCs
    SubFunctionNotSupportedInActiveSession = 0x7E => "Sub-function not supported in active session",
    ServiceNotSupportedInActiveSession = 0x7F => "Function not supported in active session",

    // Vehicle specific
    VoltageTooHigh = 0x92 => "Voltage too high",
    VoltageTooLow = 0x93 => "Voltage too low",
    UnableToReadDtcs = 0x94 => "Unable to read DTCs",
}

impl NegativeResponseCode {
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::UpperHex for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value: u8 = (*self).into();
        fmt::UpperHex::fmt(&value, f)
    }
}
