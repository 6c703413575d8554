//! JSON wire protocol between the host application and the engine

mod descriptor;
mod message;

pub use descriptor::{
    ItemId, MetronomeDescriptor, RegionDescriptor, RegionMetadata, TimelineDescriptor,
    TrackDescriptor,
};
pub use message::{
    ControlMessage, EventMessage, MetronomeMessage, RegionBufferRequest, TimelineUpdateMessage,
    TrackControl, TrackControlMessage, TransportAction, TransportMessage,
};
