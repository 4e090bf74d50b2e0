fn main() -> anyhow::Result<()> {
    teamdaily_lib::run()
}
