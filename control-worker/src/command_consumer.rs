use std::sync::Arc;

use control_bus::Bus;
use control_shared::domain::{Command, CommandKind, Event, InstanceStatus, Response};
use tracing::{error, info, warn};

use crate::driver::PlatformDriver;

/// Subscribes to a platform's command channel and dispatches each command
/// to the platform driver, publishing the matching lifecycle event(s) and,
/// if the command carried a reply channel, the response.
pub struct CommandConsumer {
    bus: Arc<Bus>,
    driver: Arc<dyn PlatformDriver>,
    command_channel: &'static str,
}

impl CommandConsumer {
    pub fn new(bus: Arc<Bus>, driver: Arc<dyn PlatformDriver>, command_channel: &'static str) -> Self {
        Self {
            bus,
            driver,
            command_channel,
        }
    }

    pub async fn run(&self) -> control_shared::ControlResult<()> {
        let bus = self.bus.clone();
        let driver = self.driver.clone();
        let channel = self.command_channel;

        self.bus
            .subscribe::<Command, _>(channel, move |command, reply_channel| {
                let bus = bus.clone();
                let driver = driver.clone();
                tokio::spawn(async move {
                    handle_command(&bus, driver.as_ref(), command, reply_channel).await;
                });
            })
            .await
    }
}

async fn handle_command(
    bus: &Bus,
    driver: &dyn PlatformDriver,
    command: Command,
    reply_channel: Option<String>,
) {
    let instance_id = command.instance_id.clone();
    let correlation_id = command.correlation_id;

    let outcome = match command.kind {
        CommandKind::Start => {
            let Some(config) = command.configuration.as_ref() else {
                let response = Response::failure(
                    &instance_id,
                    correlation_id,
                    "start requires a declared configuration",
                );
                respond(bus, reply_channel.as_deref(), &response).await;
                return;
            };
            match driver.start(&instance_id, config).await {
                Ok(runtime_info) => {
                    publish_event(bus, Event::InstanceStarted { instance_id: instance_id.clone(), correlation_id }).await;
                    publish_status_changed(bus, &instance_id, correlation_id, InstanceStatus::Stopped, InstanceStatus::Running, "worker").await;
                    Ok(runtime_info)
                }
                Err(e) => Err(e),
            }
        }
        CommandKind::Stop => match driver.stop(&instance_id).await {
            Ok(runtime_info) => {
                publish_event(bus, Event::InstanceStopped { instance_id: instance_id.clone(), correlation_id }).await;
                publish_status_changed(bus, &instance_id, correlation_id, InstanceStatus::Running, InstanceStatus::Stopped, "worker").await;
                Ok(runtime_info)
            }
            Err(e) => Err(e),
        },
        CommandKind::Restart => {
            if command.configuration.is_none() {
                warn!(instance_id, "restart without configuration: stop-only, caller should reconfigure via stop+start");
            }
            match driver.restart(&instance_id, command.configuration.as_ref()).await {
                Ok(runtime_info) => Ok(runtime_info),
                Err(e) => Err(e),
            }
        }
        CommandKind::Delete => match driver.stop(&instance_id).await {
            Ok(runtime_info) => {
                publish_event(bus, Event::InstanceDeleted { instance_id: instance_id.clone(), correlation_id }).await;
                Ok(runtime_info)
            }
            // Delete is idempotent: a not-found instance is already gone.
            Err(control_shared::ControlError::NotFound(_)) => Ok(control_shared::domain::RuntimeInfo::stopped(&instance_id)),
            Err(e) => Err(e),
        },
    };

    match outcome {
        Ok(runtime_info) => {
            let response = control_shared::domain::Response::success(&instance_id, correlation_id, runtime_info);
            respond(bus, reply_channel.as_deref(), &response).await;
        }
        Err(e) => {
            error!(instance_id, error = %e, "command execution failed");
            publish_status_changed(bus, &instance_id, correlation_id, InstanceStatus::Running, InstanceStatus::Error, "worker").await;
            let response = Response::failure(&instance_id, correlation_id, e.to_string());
            respond(bus, reply_channel.as_deref(), &response).await;
        }
    }
}

async fn respond(bus: &Bus, reply_channel: Option<&str>, response: &Response) {
    let Some(channel) = reply_channel else {
        // No reply channel: the command was fire-and-forget.
        return;
    };
    if let Err(e) = bus.publish(channel, response).await {
        error!(channel, error = %e, "failed to publish command response");
    }
}

async fn publish_event(bus: &Bus, event: Event) {
    if let Err(e) = bus.publish(control_bus::CHANNEL_INSTANCE_EVENTS, &event).await {
        error!(error = %e, "failed to publish instance event");
    }
}

async fn publish_status_changed(
    bus: &Bus,
    instance_id: &str,
    correlation_id: uuid::Uuid,
    old: InstanceStatus,
    new: InstanceStatus,
    source: &str,
) {
    let event = Event::InstanceStatusChanged {
        instance_id: instance_id.to_string(),
        correlation_id,
        old,
        new,
        source: source.to_string(),
    };
    if let Err(e) = bus.publish(control_bus::CHANNEL_STATUS_EVENTS, &event).await {
        error!(error = %e, "failed to publish status change event");
    }
}
