pub use generated_abi::{
    Move,
    PlayerSlot,
    rps_types,
};

pub mod config;
pub mod contract;
pub mod controller;
pub mod game_view;
pub mod poller;
pub mod reveal;
pub mod wallets;

#[cfg(test)]
mod test_support;
