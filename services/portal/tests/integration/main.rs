mod helpers;

mod http_test;
mod portal_test;
mod session_test;
mod upload_test;
