///! # Regen Seed Worker Library
///!
///! Processes admin bulk-seeding jobs: sample directory listings inserted
///! on request from the admin console.
///!
///! ## Modules
///!
///! - `queue`: claims pending seed jobs and records outcomes
///! - `seeder`: generates and inserts sample enterprises
///! - `orchestrator`: the polling loop and job dispatch

pub mod orchestrator;
pub mod queue;
pub mod seeder;
