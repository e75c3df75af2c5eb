mod config;
mod error;
mod poller;
mod reader;
mod state;
mod status;
mod tray;

use tao::{
    event::Event,
    event_loop::{ControlFlow, EventLoopBuilder},
};
use tray_icon::{menu::MenuEvent, TrayIcon};
use tracing::{error, info};

use crate::poller::PollOutcome;
use crate::reader::BatteryReader;
use crate::state::TrayState;
use crate::status::IconBucket;

enum UserEvent {
    MenuEvent(MenuEvent),
    Battery(PollOutcome),
}

fn main() {
    // Init tracing to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("rivalcfg-tray starting");

    let cfg = config::load();
    info!(
        command = %cfg.command,
        interval_secs = cfg.poll_interval.as_secs(),
        "config loaded"
    );

    let mut app_state = TrayState::new();

    let icons = match tray::IconSet::load(cfg.asset_dir.as_deref()) {
        Ok(icons) => icons,
        Err(e) => {
            error!(error = %e, "failed to prepare tray icons");
            std::process::exit(1);
        }
    };
    let generated = IconBucket::ALL
        .iter()
        .filter(|b| icons.source(**b) == Some(&tray::IconSource::Generated))
        .count();
    info!(generated, total = IconBucket::ALL.len(), "tray icons ready");

    let mut event_loop = EventLoopBuilder::<UserEvent>::with_user_event().build();

    // Suppress dock icon on macOS, must be set before run()
    #[cfg(target_os = "macos")]
    {
        use tao::platform::macos::{ActivationPolicy, EventLoopExtMacOS};
        event_loop.set_activation_policy(ActivationPolicy::Accessory);
    }

    let proxy = event_loop.create_proxy();
    MenuEvent::set_event_handler(Some(move |event| {
        let _ = proxy.send_event(UserEvent::MenuEvent(event));
    }));

    let (menu, menu_items) = match tray::build_menu(&app_state.status_text()) {
        Ok(built) => built,
        Err(e) => {
            error!(error = %e, "failed to build tray menu");
            std::process::exit(1);
        }
    };

    // The tray icon must be created inside the event loop (after Init)
    let mut tray_icon: Option<TrayIcon> = None;

    // The poller starts with the loop so its first outcome has a tray to land on.
    let mut poller: Option<poller::PollerHandle> = None;
    let reader = BatteryReader::new(cfg.command.clone(), cfg.args.clone());
    let mut pending_reader = Some(reader);
    let poll_interval = cfg.poll_interval;
    let proxy = event_loop.create_proxy();

    event_loop.run(move |event, _event_loop_target, control_flow| {
        *control_flow = ControlFlow::Wait;

        match event {
            Event::NewEvents(tao::event::StartCause::Init) => {
                let built = icons
                    .get(app_state.bucket)
                    .map_or_else(|| tray::generate_icon(app_state.bucket), Ok)
                    .and_then(|icon| tray::build_tray(menu.clone(), icon, &app_state.tooltip));
                match built {
                    Ok(ti) => {
                        tray_icon = Some(ti);
                        info!("tray icon created");
                    }
                    Err(e) => {
                        error!(error = %e, "failed to create tray icon");
                        *control_flow = ControlFlow::ExitWithCode(1);
                        return;
                    }
                }

                if let Some(reader) = pending_reader.take() {
                    let proxy = proxy.clone();
                    match poller::spawn(reader, poll_interval, move |outcome| {
                        proxy.send_event(UserEvent::Battery(outcome)).is_ok()
                    }) {
                        Ok(handle) => poller = Some(handle),
                        Err(e) => {
                            error!(error = %e, "failed to start battery poller");
                            *control_flow = ControlFlow::ExitWithCode(1);
                            return;
                        }
                    }
                }

                // Wake up the run loop on macOS so the icon appears
                #[cfg(target_os = "macos")]
                {
                    use objc2_core_foundation::CFRunLoop;
                    if let Some(rl) = CFRunLoop::main() {
                        rl.wake_up();
                    }
                }
            }

            Event::UserEvent(UserEvent::Battery(outcome)) => {
                let change = app_state.apply(outcome);
                if change.is_empty() {
                    return;
                }
                if let Some(ref ti) = tray_icon {
                    tray::render(ti, &menu_items, &icons, &app_state, change);
                }
                info!(
                    reading = %app_state.reading,
                    bucket = %app_state.bucket,
                    polls = app_state.polls,
                    "tray updated"
                );
            }

            Event::UserEvent(UserEvent::MenuEvent(event)) => {
                if event.id == menu_items.exit_item.id() {
                    info!("exit requested");
                    if let Some(mut handle) = poller.take() {
                        handle.stop();
                    }
                    tray_icon.take();
                    *control_flow = ControlFlow::Exit;
                }
            }

            _ => {}
        }
    });
}
