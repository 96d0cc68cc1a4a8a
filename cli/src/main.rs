fn main() -> anyhow::Result<()> {
    kiwi_cli::run()
}
