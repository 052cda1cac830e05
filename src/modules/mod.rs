pub mod upload_job;
