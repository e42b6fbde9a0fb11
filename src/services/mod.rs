/// Slash command and select menu handling.
pub mod commands;
/// Gateway event routing.
pub mod dispatcher;
/// OpenAPI documentation generation.
pub mod documentation;
/// Gateway reconnection loop.
pub mod gateway_supervisor;
/// Health check service.
pub mod health_service;
/// Option edits followed by a poll resync.
pub mod option_service;
/// Daily poll recreation.
pub mod scheduler;
/// Ready handler: command registration and initial poll.
pub mod startup;
/// Read-only views of the poll and options.
pub mod status_service;
/// Vote handling and overflow thread creation.
pub mod vote_observer;
