pub mod clock;
pub mod messaging;
pub mod signal;
pub mod vision_llm;

pub use clock::SystemClock;
pub use messaging::SimulatedWhatsAppChannel;
pub use signal::TerminalBellSignal;
pub use vision_llm::OpenAiVisionAdapter;
