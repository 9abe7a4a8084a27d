//! Domain model (tasks, outbound messages, IDs, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod task;

pub use self::errors::{DispatchError, ErrorKind, StoreError, TransportError};
pub use self::ids::{Id, IdMarker, MessageId};
pub use self::message::{
    GROUP_TOKEN_ID_MAX_CHARS, MessageBody, OutboundMessage, SendReceipt, TaskMessageBody,
    WireMessage, group_id,
};
pub use self::task::{
    SyncTask, TOKEN_TYPE_BOTH, TaskKey, TokenType, TokenTypeFilter, dispatch_order,
};
