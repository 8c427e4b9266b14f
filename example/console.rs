//! headless dinner chat in the terminal (native only).
//! same controller as the bevy panel, driven by `ChatController::submit`.
//!
//! env (build time):
//!   OPENAI_API_KEY   (key)
//!   LLM_BASE_URL     (default https://api.openai.com)
//!   LLM_MODEL        (default gpt-4o-mini)

#[cfg(not(target_arch = "wasm32"))]
mod console {
    use bevy_dinner_chat::{ApiStatus, ChatConfig, ChatController, ChatRole, ChatView, MessageId, default_transport};
    use std::io::{BufRead, Write};

    /// prints bubbles as lines; updates reprint the bubble with its id.
    struct ConsoleView;

    impl ChatView for ConsoleView {
        fn append_message(&mut self, id: MessageId, role: ChatRole, text: &str) {
            let face = if role == ChatRole::User { "🙂" } else { "🌿" };
            println!("[{}] {} {}", id.0, face, text);
        }
        fn update_message(&mut self, id: MessageId, text: &str) {
            println!("[{}] 🌿 {}", id.0, text);
        }
        fn set_status(&mut self, status: ApiStatus, label: &str) {
            println!("  ({}) {}", status.style_key(), label);
        }
        fn set_input_enabled(&mut self, enabled: bool) {
            if !enabled {
                println!("  ...");
            }
        }
        fn clear_input(&mut self) {}
    }

    #[tokio::main(flavor = "multi_thread", worker_threads = 1)]
    pub async fn run() {
        let mut controller = ChatController::new(ChatConfig::from_build_env());
        let transport = default_transport();
        let mut view = ConsoleView;
        controller.initialize(&mut view);

        let stdin = std::io::stdin();
        loop {
            print!("> ");
            let _ = std::io::stdout().flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            controller.submit(&line, transport.as_ref(), &mut view).await;
        }
        println!("transcript: {} turns", controller.transcript().len());
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    console::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {}
