// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod forms;
pub mod ids;
pub mod listview;
pub mod model;
pub mod projection;
pub mod query;
pub mod rng;
pub mod sorting;
pub mod state;
pub mod status;
mod wire;

pub use forms::*;
pub use ids::*;
pub use listview::*;
pub use model::*;
pub use projection::*;
pub use query::*;
pub use rng::*;
pub use sorting::*;
pub use state::*;
pub use status::*;
