//! Artifact packaging and naming

use db_backup::archive::{self, dump_file_name, timestamp, Compressor, FilenamePattern};
use rstest::rstest;
use test_utils::{fixed_now, TestContext};

#[rstest]
#[case(Compressor::Gzip)]
#[case(Compressor::Bzip2)]
fn test_pack_and_unpack_schema_files(#[case] compressor: Compressor) {
    let ctx = TestContext::new();
    let shop = ctx.create_file("dump/shop_2024.sql", "CREATE TABLE t (id INT);\n");
    let blog = ctx.create_file("dump/blog_2024.sql", "INSERT INTO p VALUES (1);\n");
    let artifact = ctx.temp_dir().join(format!("backup.{}", compressor.extension()));

    let size = archive::pack(&[shop, blog], &artifact, compressor).unwrap();
    assert!(size > 0);

    let restored = ctx.create_subdir("restored");
    archive::unpack(&artifact, &restored, compressor).unwrap();

    let files = archive::list_files(&restored).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["blog_2024.sql", "shop_2024.sql"]);
    assert_eq!(
        ctx.read_file("restored/shop_2024.sql").unwrap(),
        "CREATE TABLE t (id INT);\n"
    );
}

#[test]
fn test_unpack_with_wrong_compressor_fails() {
    let ctx = TestContext::new();
    let file = ctx.create_file("dump/all.sql", "SELECT 1;\n");
    let artifact = ctx.temp_dir().join("backup.tgz");
    archive::pack(&[file], &artifact, Compressor::Gzip).unwrap();

    let dest = ctx.create_subdir("out");
    assert!(archive::unpack(&artifact, &dest, Compressor::Bzip2).is_err());
}

#[rstest]
#[case(false, Compressor::Gzip, "db_backup_2024-05-17T03:04:05Z.tgz")]
#[case(true, Compressor::Gzip, "db_backup_2024-05-17T03-04-05Z.tgz")]
#[case(false, Compressor::Bzip2, "db_backup_2024-05-17T03:04:05Z.tbz2")]
fn test_default_pattern(#[case] safechars: bool, #[case] compressor: Compressor, #[case] expected: &str) {
    let pattern = FilenamePattern::default();
    assert_eq!(pattern.render(fixed_now(), compressor, safechars), expected);
}

#[test]
fn test_custom_pattern_keeps_literals() {
    let pattern = FilenamePattern::parse("nightly/{{ .now }}-db.{{ .compression }}").unwrap();
    assert_eq!(
        pattern.render(fixed_now(), Compressor::Gzip, true),
        "nightly/2024-05-17T03-04-05Z-db.tgz"
    );
}

#[test]
fn test_dump_file_names() {
    let stamp = timestamp(fixed_now(), true);
    assert_eq!(dump_file_name(Some("shop"), &stamp), "shop_2024-05-17T03-04-05Z.sql");
    assert_eq!(dump_file_name(None, &stamp), "all_2024-05-17T03-04-05Z.sql");
}
