pub mod db;
pub mod intent_llm;
pub mod telegram;

pub use db::PgStore;
pub use intent_llm::OpenAiIntentAdapter;
pub use telegram::TelegramClient;
