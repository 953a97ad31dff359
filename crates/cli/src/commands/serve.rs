//! `caregaps serve` — Start the HTTP serving surface.

pub async fn run(port_override: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config()?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }

    println!("CareGaps Gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Profile:   {:?}", config.agent.profile);
    println!("   Model:     {}", config.llm.model);

    caregaps_gateway::start(config).await?;

    Ok(())
}
