// Integration tests for graceful shutdown functionality
// These tests verify that the APRS ingester can gracefully shutdown
// without losing messages in the queue

#[cfg(test)]
mod graceful_shutdown_tests {
    // Note: These are placeholder tests. Full integration testing would require:
    // 1. A test NATS server instance
    // 2. A mock APRS-IS server
    // 3. Signal handling test infrastructure
    //
    // For now, we rely on manual testing and production monitoring

    #[test]
    #[ignore] // Requires NATS server and mock APRS-IS
    fn test_graceful_shutdown_placeholder() {
        // TODO: Implement full integration test with:
        // - Start NATS server
        // - Start APRS ingester
        // - Send test messages
        // - Send SIGTERM
        // - Verify all messages reach JetStream
        // - Verify shutdown completes within timeout
        todo!("Graceful shutdown tested manually in staging");
    }

    #[test]
    #[ignore] // Requires running ingester instance
    fn test_health_check_placeholder() {
        // TODO: Implement health check integration test:
        // - Start ingester
        // - Poll /health endpoint
        // - Verify returns 200 when connected
        // - Verify returns 503 when disconnected
        todo!("Health check endpoint tested manually");
    }

    #[test]
    #[ignore] // Requires NATS server and two ingester instances
    fn test_blue_green_deployment_placeholder() {
        // TODO: Implement blue-green deployment test:
        // - Start primary ingester
        // - Start secondary ingester
        // - Verify both publish to same stream
        // - Stop primary
        // - Verify secondary continues
        // - Verify no message loss
        todo!("Blue-green deployment tested manually");
    }
}
