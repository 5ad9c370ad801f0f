use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

// Monotonic transfer counters, shared across the stack behind an Arc and
// bumped with independent fetch-adds. Never reset.
#[derive(Debug, Default)]
pub struct Stats {
    pub bytes_sent: AtomicU64,
    pub bytes_received: AtomicU64,
    pub retransmissions: AtomicU64,
    pub checksum_errors: AtomicU64,
}

impl Stats {
    pub fn print(&self) {
        let sent = self.bytes_sent.load(Relaxed);
        let received = self.bytes_received.load(Relaxed);
        let retransmissions = self.retransmissions.load(Relaxed);
        let checksum_errors = self.checksum_errors.load(Relaxed);

        println!("bytes sent:        {sent}");
        println!("bytes received:    {received}");
        println!("retransmissions:   {retransmissions}");
        println!("checksum errors:   {checksum_errors}");
        if sent > 0 {
            println!(
                "error rate:        {:.1}%",
                checksum_errors as f64 * 100.0 / sent as f64
            );
        }
    }
}
