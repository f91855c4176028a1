//! Application Services
//!
//! Services that orchestrate domain logic over the ports.
//!
//! - `Worker`: Drains the watch queue once per received tick
//! - `ExecutionSink`: Marks triggered orders as executed
//! - `OrderIntake`: Records a new order and starts watching it

mod execution;
mod intake;
mod worker;

pub use execution::{ExecutionError, ExecutionSink};
pub use intake::{IntakeError, IntakeSettings, OrderIntake, PlaceOrderRequest, PlacedOrder};
pub use worker::{DEFAULT_BATCH_SIZE, DrainOutcome, DrainStop, Worker, WorkerConfig};
