fn main() -> eframe::Result {
    stack_annotator::run_native(None)
}
