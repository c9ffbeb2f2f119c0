pub mod adapter_cmd;
pub mod doctor;
pub mod init;
pub mod up;
