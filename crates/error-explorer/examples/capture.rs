// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Walks through the SDK surface.
//!
//! Events go to an in-memory transport unless `ERROR_EXPLORER_TOKEN` and
//! `ERROR_EXPLORER_PROJECT` are set, in which case options are loaded from
//! the environment and sent to the configured endpoint.
//!
//! ```text
//! cargo run -p error-explorer --example capture
//! ```

use std::sync::Arc;
use std::time::Duration;

use error_explorer::{
	Breadcrumb, BreadcrumbType, CaptureContext, ClientBuilder, Level, MemoryTransport, Options,
	User,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
struct PaymentError {
	order_id: u32,
}

impl std::fmt::Display for PaymentError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "payment declined for order {}", self.order_id)
	}
}

impl std::error::Error for PaymentError {}

fn charge(order_id: u32) -> Result<(), PaymentError> {
	if order_id % 2 == 1 {
		return Err(PaymentError { order_id });
	}
	Ok(())
}

fn process_order(order_id: u32) -> error_explorer::Result<()> {
	let scope = error_explorer::push_scope()?;
	scope.set_tag("order_id", order_id.to_string());
	scope.add_breadcrumb(Breadcrumb::new("charging card").category("payment"));

	if let Err(e) = charge(order_id) {
		let context = CaptureContext::new()
			.tag("checkout_step", "payment")
			.extra("attempt", 1);
		let id = error_explorer::capture_exception(&e, Some(context))?;
		println!("captured exception: {id:?}");
	}
	Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with(tracing_subscriber::fmt::layer())
		.with(error_explorer::ExplorerLayer::new())
		.init();

	let memory = Arc::new(MemoryTransport::new());
	let remote = std::env::var("ERROR_EXPLORER_TOKEN").is_ok();
	let builder = if remote {
		ClientBuilder::new(Options::load(None)?)
	} else {
		let options = Options::builder("demo-token", "demo-app")
			.environment("development")
			.release("1.0.0")
			.debug(true)
			.build()?;
		ClientBuilder::new(options).transport(memory.clone())
	};
	error_explorer::init_with(builder)?;

	error_explorer::set_user(
		User::with_id("12345")
			.email("developer@example.com")
			.username("dev_user"),
	)?;
	error_explorer::set_tags([("app_version", "1.0.0"), ("feature_flags", "beta_features")])?;

	error_explorer::add_breadcrumb(
		Breadcrumb::new("Application started")
			.category("lifecycle")
			.kind(BreadcrumbType::Debug),
	)?;
	error_explorer::add_breadcrumb(
		Breadcrumb::new("User authenticated")
			.category("auth")
			.kind(BreadcrumbType::User),
	)?;

	tracing::info!(target: "demo", "warming caches");

	for order_id in 1..=2 {
		process_order(order_id)?;
	}

	error_explorer::with_scope(|scope| {
		scope.set_tag("checkpoint", "main_flow");
		let id = error_explorer::capture_message("checkpoint reached", Level::Info, None);
		println!("captured message: {id:?}");
	})?;

	tracing::error!(target: "demo", attempts = 3, "inventory sync failed");

	let drained = error_explorer::close(Some(Duration::from_secs(2)))?;
	println!("closed, drained: {drained}");

	if !remote {
		for event in memory.events() {
			println!("{} [{}] {}", event.event_id, event.level, event.title());
		}
	}

	error_explorer::reset();
	Ok(())
}
