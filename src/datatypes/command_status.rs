use num_enum::TryFromPrimitive;

/// The command_status field of an SMPP response indicates the success or
/// failure of the request it answers. Requests carry `Ok` (zero).
///
/// The SMPP v3.4 table is larger than this; codes an SMSC sends that are not
/// listed here decode as [`CommandStatus::UnknownError`] so that a vendor
/// specific status never tears down the session.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandStatus {
    /// No Error
    Ok = 0x0000_0000,

    /// Message Length is invalid
    InvalidMsgLength = 0x0000_0001,

    /// Command Length is invalid
    InvalidCommandLength = 0x0000_0002,

    /// Invalid Command ID
    InvalidCommandId = 0x0000_0003,

    /// Incorrect BIND Status for given command
    IncorrectBindStatus = 0x0000_0004,

    /// ESME Already in Bound State
    AlreadyBoundState = 0x0000_0005,

    /// Invalid Registered Delivery Flag
    InvalidRegisteredDeliveryFlag = 0x0000_0007,

    /// System Error
    SystemError = 0x0000_0008,

    /// Invalid Source Address
    InvalidSourceAddress = 0x0000_000A,

    /// Invalid Destination Address
    InvalidDestinationAddress = 0x0000_000B,

    /// Message ID is invalid
    InvalidMessageId = 0x0000_000C,

    /// Bind Failed
    BindFailed = 0x0000_000D,

    /// Invalid Password
    InvalidPassword = 0x0000_000E,

    /// Invalid System ID
    InvalidSystemId = 0x0000_000F,

    /// Message Queue Full
    MessageQueueFull = 0x0000_0014,

    /// Invalid Service Type
    InvalidServiceType = 0x0000_0015,

    /// Invalid esm_class field data
    InvalidEsmClassFieldData = 0x0000_0043,

    /// submit_sm or submit_multi failed
    SubmitFailed = 0x0000_0045,

    /// Invalid Source address TON
    InvalidSourceAddressTon = 0x0000_0048,

    /// Invalid Source address NPI
    InvalidSourceAddressNpi = 0x0000_0049,

    /// Invalid Destination address TON
    InvalidDestinationAddressTon = 0x0000_0050,

    /// Invalid Destination address NPI
    InvalidDestinationAddressNpi = 0x0000_0051,

    /// Invalid system_type field
    InvalidSystemType = 0x0000_0053,

    /// Throttling error (ESME has exceeded allowed message limits)
    ThrottlingError = 0x0000_0058,

    /// Invalid Scheduled Delivery Time
    InvalidScheduledDeliveryTime = 0x0000_0061,

    /// Invalid message validity period (Expiry time)
    InvalidExpiryTime = 0x0000_0062,

    /// Predefined Message Invalid or Not Found
    InvalidPredefinedMessage = 0x0000_0063,

    /// ESME Receiver Temporary App Error Code
    ReceiverTemporaryAppError = 0x0000_0064,

    /// ESME Receiver Permanent App Error Code
    ReceiverPermanentAppError = 0x0000_0065,

    /// ESME Receiver Reject Message Error Code
    ReceiverRejectMessageError = 0x0000_0066,

    /// Error in the optional part of the PDU Body
    InvalidOptionalPartOfPdu = 0x0000_00C0,

    /// Optional Parameter not allowed
    OptionalParameterNotAllowed = 0x0000_00C1,

    /// Invalid Parameter Length
    InvalidParameterLength = 0x0000_00C2,

    /// Expected Optional Parameter missing
    MissingOptionalParameter = 0x0000_00C3,

    /// Invalid Optional Parameter Value
    InvalidOptionalParameterValue = 0x0000_00C4,

    /// Delivery Failure (used for data_sm_resp)
    DeliveryFailure = 0x0000_00FE,

    /// Unknown Error
    UnknownError = 0x0000_00FF,
}

impl CommandStatus {
    /// Maps a raw command_status to a known status, folding anything outside
    /// the table into `UnknownError`.
    pub fn from_raw(raw: u32) -> Self {
        CommandStatus::try_from(raw).unwrap_or_else(|_| {
            tracing::debug!("unrecognised command_status {raw:#010x}, treating as UnknownError");
            CommandStatus::UnknownError
        })
    }

    pub fn is_ok(&self) -> bool {
        *self == CommandStatus::Ok
    }

    /// Statuses after which resubmitting the same PDU later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            CommandStatus::MessageQueueFull
                | CommandStatus::ThrottlingError
                | CommandStatus::SystemError
                | CommandStatus::ReceiverTemporaryAppError
        )
    }
}
