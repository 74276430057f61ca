mod codec;
mod vault_manager;
