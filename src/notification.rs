use notify_rust::Notification;

pub const APP_NAME: &str = "pomofocus";

pub trait Notifier: Send {
    /// Asks the OS for permission to post. Called once at startup; posting is
    /// attempted regardless of the answer.
    fn request_permission(&self) {}

    fn notify(&self, title: &str, body: &str);
}

#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    #[cfg(all(unix, not(target_os = "macos")))]
    fn request_permission(&self) {
        // freedesktop servers need no grant, only a running daemon
        match notify_rust::get_server_information() {
            Ok(info) => tracing::debug!(server = %info.name, "notification server available"),
            Err(e) => tracing::warn!(error = %e, "notification server unavailable"),
        }
    }

    #[cfg(target_os = "macos")]
    fn request_permission(&self) {
        if let Err(e) = notify_rust::set_application("com.apple.Terminal") {
            tracing::warn!(error = %e, "failed to register notification sender");
        }
    }

    fn notify(&self, title: &str, body: &str) {
        if let Err(e) = Notification::new()
            .appname(APP_NAME)
            .summary(title)
            .body(body)
            .show()
        {
            tracing::warn!(error = %e, "failed to send notification");
        }
    }
}
