fn main() {
    println!("The service binary lives in the api_server crate.");
    println!("To start the backend, run:");
    println!("   cargo run -p api_server");
    println!();
    println!("The API server exposes the full surface:");
    println!("   • POST /markets/attention/ - mint a token and register a market");
    println!("   • GET /markets/attention/ - list markets");
    println!("   • GET /markets/attention/trades/:market_id - reconstruct trade history");
}
