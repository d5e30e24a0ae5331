//! Приоритетный Publish–Subscribe хаб.
//!
//! Модуль собран снизу вверх:
//!
//! - `envelope`: конверт сообщения с ключом `(priority, sequence)`.
//! - `queue`: стабильная min-очередь конвертов с ожиданием `pop` и
//!   учётом обработанных конвертов для `join`.
//! - `registry`: реестр подписок топик → обработчики в порядке регистрации.
//! - `hub`: публичный хаб, цикл диспетчера и жизненный цикл
//!   (`start`/`stop`/`join`).

pub mod envelope;
pub mod hub;
pub mod queue;
pub mod registry;

pub use envelope::*;
pub use hub::*;
pub use queue::*;
pub use registry::*;
