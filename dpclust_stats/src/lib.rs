#![warn(unused_extern_crates)]
#![warn(
    clippy::all,
    clippy::imprecise_flops,
    clippy::suboptimal_flops,
    clippy::unseparated_literal_suffix,
    clippy::unreadable_literal,
    clippy::option_option,
    clippy::implicit_clone
)]
pub mod assignment;
pub mod convergence;
pub mod likelihood;
mod ln_prob;
pub mod mh;
pub mod prior_process;

pub use dpclust_consts::rv;
pub use ln_prob::{ln_clamped, normalize_ln_pair};
