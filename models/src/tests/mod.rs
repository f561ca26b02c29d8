mod server_info;
mod session;
