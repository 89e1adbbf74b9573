fn main() {
    println!("Thief — networked four-seat trick-taking card game");
    println!();
    println!("Usage:");
    println!("  Start the server:   thief-server -f <deal-file> [-p <port>] [-t <timeout>]");
    println!("  Connect a client:   thief-client -H <host> -p <port> -N|-E|-S|-W [-a]");
    println!();
    println!("Run thief-server first, then four thief-client instances (one per seat).");
}
