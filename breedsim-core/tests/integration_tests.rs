//! End-to-end tests across the genotype file codec and the algorithms.
//!
//! Each group builds its data in a temporary directory and drives the
//! public API the way a breeding simulation would.

use breedsim_geno::{DosageMatrix, GenoError, GenotypeMatrix, GenotypeSink, GenotypeSource, MISSING};

/// 3 markers x 4 individuals used across the groups below.
fn small_matrix() -> DosageMatrix {
    DosageMatrix::from_marker_rows(&[vec![0, 0, 0, 0], vec![0, 1, 2, 1], vec![2, 2, 2, 1]])
}

fn ids(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

mod bed_codec {
    use super::*;
    use breedsim_geno::bed::{has_missing, has_missing_in_bed, read_bed, write_bed};

    #[test]
    fn test_small_matrix_round_trip_through_disk_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("geno.bed");
        let src = GenotypeMatrix::from_source(&small_matrix()).unwrap();
        write_bed(&src, &bed, 2, true).unwrap();

        // 3-byte header + one byte per marker.
        assert_eq!(std::fs::metadata(&bed).unwrap().len(), 3 + 3);

        let path = dir.path().join("geno.gmat");
        let mut dest = GenotypeMatrix::create(&path, 3, 4).unwrap();
        read_bed(&bed, &mut dest, 1, 2, true).unwrap();
        dest.close().unwrap();

        let reopened = GenotypeMatrix::open(&path).unwrap();
        assert_eq!(reopened.to_dosage_matrix(), small_matrix());
        assert!(!has_missing(&reopened, 2).unwrap());
        assert!(!has_missing_in_bed(&bed, 4, 0, 2, false).unwrap());
    }

    #[test]
    fn test_missing_calls_survive_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("geno.bed");
        let mut src = small_matrix();
        src.set(1, 3, MISSING);
        src.set(2, 0, MISSING);
        write_bed(&src, &bed, 1, false).unwrap();

        let mut dest = DosageMatrix::missing(3, 4);
        read_bed(&bed, &mut dest, 0, 3, false).unwrap();
        assert_eq!(dest, src);
        assert!(has_missing(&dest, 1).unwrap());
        assert!(has_missing_in_bed(&bed, 4, 2, 1, false).unwrap());
    }

    #[test]
    fn test_reading_with_wrong_dimensions_fails() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("geno.bed");
        write_bed(&small_matrix(), &bed, 1, false).unwrap();

        let mut too_many_markers = DosageMatrix::missing(5, 4);
        let err = read_bed(&bed, &mut too_many_markers, 0, 1, false).unwrap_err();
        assert!(err.downcast_ref::<GenoError>().is_some(), "{}", err);
    }
}

mod quality_control {
    use super::*;
    use breedsim_core::qc::{filter_genotypes, QcConfig, QcReport};

    #[test]
    fn test_maf_threshold_on_small_matrix() {
        let config = QcConfig {
            maf: Some(0.1),
            ..Default::default()
        };
        let report = filter_genotypes(&small_matrix(), None, &config, 2, true).unwrap();
        assert_eq!(report.markers, vec![1, 2]);
        assert_eq!(report.individuals, vec![0, 1, 2, 3]);
        assert!((report.marker_stats[1].maf.unwrap() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_filter_disk_matrix_read_from_bed() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("geno.bed");
        let mut src = small_matrix();
        src.set(1, 0, MISSING);
        breedsim_geno::bed::write_bed(&src, &bed, 1, false).unwrap();

        let mut matrix = GenotypeMatrix::anonymous(3, 4).unwrap();
        breedsim_geno::bed::read_bed(&bed, &mut matrix, 0, 2, false).unwrap();

        let config = QcConfig {
            geno: Some(0.2),
            mind: Some(0.4),
            ..Default::default()
        };
        let report = filter_genotypes(&matrix, None, &config, 2, false).unwrap();
        assert_eq!(report.markers, vec![0, 2]);
        // Individual 0's only missing call sits in a dropped marker.
        assert_eq!(report.individuals, vec![0, 1, 2, 3]);

        let json = dir.path().join("qc.json");
        report.save_json(&json).unwrap();
        let loaded: QcReport = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(loaded.markers, report.markers);
    }
}

mod mixing {
    use super::*;
    use breedsim_core::mix::{merge_from_matrix, merge_from_memory, MixOp};

    #[test]
    fn test_assign_subset_then_merge_from_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let mut dest = GenotypeMatrix::create(dir.path().join("pop.gmat"), 3, 6).unwrap();

        merge_from_memory(&mut dest, &small_matrix(), Some(&[5, 0, 2, 3][..]), MixOp::Assign, 2).unwrap();
        assert_eq!(dest.individual(5), small_matrix().individual(0));
        assert!(dest.individual(1).iter().all(|&v| v == MISSING));
        assert!(dest.individual(4).iter().all(|&v| v == MISSING));

        let other = GenotypeMatrix::from_source(&DosageMatrix::from_marker_rows(&[vec![2], vec![2], vec![2]])).unwrap();
        merge_from_matrix(&mut dest, &other, Some(&[1][..]), MixOp::Assign, 1).unwrap();
        assert_eq!(dest.individual(1), &[2, 2, 2]);

        let zeros = DosageMatrix::from_marker_rows(&[vec![0; 6], vec![0; 6], vec![0; 6]]);
        merge_from_memory(&mut dest, &zeros, None, MixOp::Min, 3).unwrap();
        // Untouched columns are still missing; Min keeps them missing.
        assert!(dest.individual(4).iter().all(|&v| v == MISSING));
        assert_eq!(dest.individual(1), &[0, 0, 0]);
    }
}

mod mating {
    use super::*;
    use breedsim_core::mating::{is_mendelian, simulate_mating, MatingConfig};
    use breedsim_core::mix::MixOp;

    #[test]
    fn test_three_block_offspring_are_mendelian() {
        let parents = small_matrix();
        let sires = [0, 1, 2, 3, 1];
        let dams = [2, 3, 2, 0, 1];
        let mut kids = GenotypeMatrix::anonymous(3, sires.len()).unwrap();
        let config = MatingConfig {
            n_block: 3,
            seed: Some(2024),
        };
        simulate_mating(&mut kids, &parents, &sires, &dams, &config, MixOp::Assign, 2).unwrap();

        for p in 0..sires.len() {
            for i in 0..3 {
                assert!(is_mendelian(
                    parents.get(i, sires[p]),
                    parents.get(i, dams[p]),
                    kids.get(i, p)
                ));
            }
        }
        // Marker 0 is fixed at 0 in every parent.
        assert!((0..sires.len()).all(|p| kids.get(0, p) == 0));
    }

    #[test]
    fn test_unseeded_runs_are_still_mendelian() {
        let parents = small_matrix();
        let mut kids = DosageMatrix::missing(3, 2);
        simulate_mating(&mut kids, &parents, &[1, 2], &[3, 1], &MatingConfig::default(), MixOp::Assign, 1).unwrap();
        assert!((0..3).all(|i| is_mendelian(parents.get(i, 1), parents.get(i, 3), kids.get(i, 0))));
        assert!((0..3).all(|i| is_mendelian(parents.get(i, 2), parents.get(i, 1), kids.get(i, 1))));
    }
}

mod pedigree_correction {
    use super::*;
    use breedsim_core::pedigree::{correct_pedigree, ResolverConfig};
    use breedsim_geno::pedigree::{parse_pedigree_file, write_corrected_file, ParentStatus};

    /// Columns S1, S2, S3, K. S1 is the only sire compatible with K.
    fn family() -> (DosageMatrix, Vec<String>) {
        let m = DosageMatrix::from_marker_rows(&[vec![1, 2, 0, 0], vec![2, 2, 0, 2], vec![0, 1, 1, 1]]);
        (m, ids(&["S1", "S2", "S3", "K"]))
    }

    fn config() -> ResolverConfig {
        ResolverConfig {
            excl_threshold: 0.1,
            assign_threshold: 0.05,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_compatible_sire_is_assigned() {
        let (m, g) = family();
        let dir = tempfile::tempdir().unwrap();
        let ped_path = dir.path().join("ped.txt");
        std::fs::write(&ped_path, "id sire dam birth\nK S3 0 2020\nX S1 0 2021\n").unwrap();

        let pedigree = parse_pedigree_file(&ped_path).unwrap();
        let sires = ids(&["S1", "S2", "S3"]);
        let records = correct_pedigree(&m, &g, &pedigree, Some(&sires), Some(&[][..]), &config(), 2, true).unwrap();

        assert_eq!(records[0].sire.id.as_deref(), Some("S1"));
        assert_eq!(records[0].sire.status, ParentStatus::Resolved);
        assert_eq!(records[0].sire.score, Some(0.0));
        assert_eq!(records[0].dam.status, ParentStatus::Unresolved);

        // X has no genotypes.
        assert_eq!(records[1].sire.status, ParentStatus::Unresolved);
        assert_eq!(records[1].sire.id.as_deref(), Some("S1"));
        assert_eq!(records[1].dam.status, ParentStatus::Unresolved);

        let out = dir.path().join("corrected.txt");
        write_corrected_file(&out, &records).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "K\tS1\t0\tresolved\tunresolved\t0.000000\tNA");
        assert_eq!(lines[2], "X\tS1\t0\tunresolved\tunresolved\tNA\tNA");
    }

    #[test]
    fn test_disk_backed_matrix() {
        let (m, g) = family();
        let disk = GenotypeMatrix::from_source(&m).unwrap();
        let pedigree = vec![breedsim_geno::pedigree::PedigreeEntry::new("K", Some("S1"), None)];
        let sires = ids(&["S1", "S2", "S3", "nobody"]);
        let records = correct_pedigree(&disk, &g, &pedigree, Some(&sires), None, &config(), 1, false).unwrap();
        assert_eq!(records[0].sire.status, ParentStatus::Unchanged);
    }
}
