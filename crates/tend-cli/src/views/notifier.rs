use owo_colors::{OwoColorize, Style};
use tend_core::notify::{Notification, NotificationLevel, Notifier};

/// Shows service notifications on the terminal. Errors go to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Success => {
                println!("{} {}", "✓".green().bold(), notification.message);
            }
            NotificationLevel::Info => {
                println!("{} {}", "•".blue(), notification.message);
            }
            NotificationLevel::Error => {
                let error_style = Style::new().red().bold();
                eprintln!("{} {}", "Error:".style(error_style), notification.message);
            }
        }
    }
}
