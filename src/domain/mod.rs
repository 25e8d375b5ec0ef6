// Domain layer: entities, RPC message contracts and ports (interfaces).

pub mod model;
pub mod ports;
pub mod rpc;
pub mod wire;
