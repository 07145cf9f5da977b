//! End-to-end create-start-stop-delete scenario exercising `InstanceService`
//! against a real in-memory bus and a minimal stand-in worker, rather than
//! unit-testing the service in isolation.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use control_api::InstanceService;
use control_bus::{Bus, InMemoryTransport};
use control_shared::domain::{Command, CommandKind, InstanceStatus, PlatformKind, PlatformHandle, Response, RuntimeInfo, ServerBinding, StatusRing};

/// Stands in for `control-worker`: replies `success=true` to every command,
/// reporting `Running` for `Start`, `Stopped` for `Stop`/`Delete`.
fn spawn_stub_worker(bus: Arc<Bus>, channel: &'static str) {
    tokio::spawn(async move {
        bus.subscribe::<Command, _>(channel, {
            let bus = bus.clone();
            move |command, reply_channel| {
                let bus = bus.clone();
                let reply_channel = reply_channel.expect("dispatched commands always carry a reply channel");
                tokio::spawn(async move {
                    let runtime_info = match command.kind {
                        CommandKind::Start | CommandKind::Restart => {
                            RuntimeInfo::started(&command.instance_id, PlatformHandle::ProcessId(1234))
                        }
                        CommandKind::Stop | CommandKind::Delete => RuntimeInfo::stopped(&command.instance_id),
                    };
                    let response = Response::success(&command.instance_id, command.correlation_id, runtime_info);
                    bus.publish(&reply_channel, &response).await.ok();
                });
            }
        })
        .await
        .unwrap();
    });
}

#[tokio::test]
async fn create_start_stop_delete_happy_path() {
    let transport = Arc::new(InMemoryTransport::new());
    let bus = Arc::new(Bus::new(transport));
    spawn_stub_worker(bus.clone(), control_bus::CHANNEL_INSTANCE_COMMANDS_PROCESS);

    let service = Arc::new(InstanceService::with_command_timeout(
        bus,
        Arc::new(StatusRing::new()),
        Duration::from_secs(2),
    ));

    let since = Utc::now() - chrono::Duration::seconds(5);
    let binding = ServerBinding {
        host: "127.0.0.1".to_string(),
        port: 8080,
        log_level: "info".to_string(),
    };
    let instance = service.create_instance("x", None, PlatformKind::Process, Some(binding));
    assert_eq!(instance.status, InstanceStatus::Created);

    let started = service.start_instance(&instance.id, None).await.unwrap();
    assert_eq!(started.status, InstanceStatus::Running);
    assert_eq!(service.get_instance(&instance.id).unwrap().status, InstanceStatus::Running);

    let stopped = service.stop_instance(&instance.id).await.unwrap();
    assert_eq!(stopped.status, InstanceStatus::Stopped);
    assert_eq!(service.get_instance(&instance.id).unwrap().status, InstanceStatus::Stopped);

    service.delete_instance(&instance.id).await.unwrap();
    assert!(service.get_instance(&instance.id).is_err());

    let changes = service.get_recent_changes(since, None);
    assert_eq!(changes.len(), 3, "one StatusChanged record per Start/Stop/Delete transition");
    assert_eq!(changes[0].old_status, InstanceStatus::Created);
    assert_eq!(changes[0].new_status, InstanceStatus::Running);
    assert_eq!(changes[1].old_status, InstanceStatus::Running);
    assert_eq!(changes[1].new_status, InstanceStatus::Stopped);
    assert_eq!(changes[2].old_status, InstanceStatus::Stopped);
    assert_eq!(changes[2].new_status, InstanceStatus::Stopped);
}

#[tokio::test]
async fn worker_absent_times_out_without_side_effects() {
    let transport = Arc::new(InMemoryTransport::new());
    let bus = Arc::new(Bus::new(transport));
    let service = Arc::new(InstanceService::with_command_timeout(
        bus,
        Arc::new(StatusRing::new()),
        Duration::from_millis(100),
    ));

    let instance = service.create_instance("unattended", None, PlatformKind::Process, None);
    let result = service.start_instance(&instance.id, None).await;
    assert!(result.is_err());
    assert_eq!(service.get_instance(&instance.id).unwrap().status, InstanceStatus::Created);
    assert!(service.get_recent_changes(Utc::now() - chrono::Duration::seconds(5), None).is_empty());
}
