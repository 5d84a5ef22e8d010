fn main() -> anyhow::Result<()> {
    plrs::run()
}
