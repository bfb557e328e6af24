// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod coerce;
pub mod derive;
pub mod ids;
pub mod model;
pub mod schema;
pub mod store;

pub use coerce::*;
pub use derive::*;
pub use ids::*;
pub use model::*;
pub use schema::*;
pub use store::*;
