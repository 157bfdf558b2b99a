mod test_malformed_frame_reports_once;
mod test_relay_client_over_socket;
