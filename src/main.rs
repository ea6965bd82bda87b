fn main() -> anyhow::Result<()> {
    daitoue_lib::run()
}
