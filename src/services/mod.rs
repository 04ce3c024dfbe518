mod telegram;

pub use telegram::{article_keyboard, split_message, InlineKeyboardMarkup, TelegramClient};
