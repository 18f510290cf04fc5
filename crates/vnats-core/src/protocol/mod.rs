//! Frame codec and topic scheme.

pub mod frame;
pub mod topic;

pub use frame::{
    classify, destination_address, source_address, AddressClass, FrameError, DEFAULT_MTU,
    ETHERNET_HEADER_LEN,
};
pub use topic::{broadcast_topic, unicast_topic, Topic, TOPIC_PREFIX};
