use citecrawl_openalex::{EntityRecord, WorkRecord};

fn load_lines(filename: &str) -> Vec<String> {
    let dir = std::env::var("BENCH_DATA_DIR")
        .expect("set BENCH_DATA_DIR to directory with sample data files");
    let path = std::path::Path::new(&dir).join(filename);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("{}: {e}", path.display()))
        .lines()
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

#[divan::bench]
fn parse_work_record(bencher: divan::Bencher) {
    let lines = load_lines("oa_works.jsonl");
    bencher.bench(|| {
        for line in &lines {
            let _: WorkRecord = sonic_rs::from_str(line).unwrap();
        }
    });
}

#[divan::bench]
fn extract_entity(bencher: divan::Bencher) {
    let lines = load_lines("oa_works.jsonl");
    bencher.bench(|| {
        let mut edges = 0usize;
        for line in &lines {
            let raw: WorkRecord = sonic_rs::from_str(line).unwrap();
            let rec = EntityRecord::try_from(raw).unwrap();
            edges += rec.cited.len();
        }
        edges
    });
}

fn main() {
    divan::main();
}
