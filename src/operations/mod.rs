pub mod op_helper;
pub mod record_op;
pub mod upload_op;
pub mod workstation_op;
