//! End-to-end composition tests: definitions, sub-studies, instances and
//! workflow resolution together.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::errors::{codes, NiflowError};
    use crate::formats::{FileFormat, ScalarType};
    use crate::pipeline::{PipelineContext, ToolInterface, ToolNode};
    use crate::spec::{DataSpec, OptionSpec};
    use crate::study::{InputMatch, Study, StudyDefinition};
    use crate::testing::fixtures::passthrough_pipeline;
    use crate::testing::{
        assert_error_code, assert_execution_order, assert_produced_by, assert_spec_not_found,
    };
    use pretty_assertions::assert_eq;

    fn mri() -> Arc<StudyDefinition> {
        StudyDefinition::builder("mri")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("preproc_pipeline"))
            .data(DataSpec::dataset("wm_seg", FileFormat::NiftiGz).produced_by("segmentation_pipeline"))
            .data(
                DataSpec::dataset("motion_mats", FileFormat::MotionMats)
                    .produced_by("motion_mats_pipeline"),
            )
            .data(DataSpec::field("tr", ScalarType::Float).produced_by("header_pipeline"))
            .option(OptionSpec::new("bet_frac", 0.5))
            .pipeline("preproc_pipeline", passthrough_pipeline(&["primary"], &["preproc"]))
            .pipeline("segmentation_pipeline", passthrough_pipeline(&["preproc"], &["wm_seg"]))
            .pipeline("motion_mats_pipeline", passthrough_pipeline(&["preproc"], &["motion_mats"]))
            .pipeline("header_pipeline", passthrough_pipeline(&["primary"], &["tr"]))
            .build()
            .unwrap()
    }

    fn anatomy() -> Arc<StudyDefinition> {
        StudyDefinition::builder("anatomy")
            .data(DataSpec::dataset("primary", FileFormat::Dicom))
            .data(DataSpec::dataset("preproc", FileFormat::NiftiGz).produced_by("preproc_pipeline"))
            .pipeline("preproc_pipeline", passthrough_pipeline(&["primary"], &["preproc"]))
            .build()
            .unwrap()
    }

    fn multi() -> Arc<StudyDefinition> {
        StudyDefinition::builder("multi")
            .sub_study("a", mri(), std::iter::empty::<(&str, &str)>())
            .sub_study("b", anatomy(), std::iter::empty::<(&str, &str)>())
            .build()
            .unwrap()
    }

    #[test]
    fn test_probing_skips_sub_studies_without_motion_mats() {
        let multi = multi();
        let mut found = Vec::new();
        let mut skipped = Vec::new();
        for sub in multi.sub_study_specs() {
            match sub.inverse_map("motion_mats") {
                Ok(name) => found.push(name),
                Err(err) => {
                    assert!(err.to_string().contains("motion_mats"));
                    skipped.push(sub.name().to_string());
                }
            }
        }
        assert_eq!(found, vec!["a_motion_mats"]);
        assert_eq!(skipped, vec!["b"]);
    }

    #[test]
    fn test_name_maps_round_trip() {
        let multi = StudyDefinition::builder("multi")
            .sub_study("a", mri(), [("shared_primary", "primary")])
            .build()
            .unwrap();
        let sub = multi.sub_study_spec("a").unwrap();
        for internal in ["primary", "preproc", "wm_seg", "motion_mats", "tr", "bet_frac"] {
            let external = sub.inverse_map(internal).unwrap();
            assert!(multi.declares(&external), "'{external}' not declared");
            assert_eq!(sub.map(&external).unwrap(), internal);
        }
        assert_eq!(sub.inverse_map("primary").unwrap(), "shared_primary");
        assert!(sub.map("a_primary").is_err());
    }

    #[test]
    fn test_redeclared_spec_replaces_base_producer() {
        let reference = StudyDefinition::builder("reference")
            .extends(mri())
            .data(
                DataSpec::dataset("wm_seg", FileFormat::NiftiGz)
                    .produced_by("reference_segmentation_pipeline"),
            )
            .pipeline(
                "reference_segmentation_pipeline",
                passthrough_pipeline(&["primary"], &["wm_seg"]),
            )
            .build()
            .unwrap();
        assert_produced_by(&reference, "wm_seg", "reference_segmentation_pipeline");

        let study = Study::builder(Arc::clone(&reference), "subject")
            .input(InputMatch::dataset("primary", "t1", FileFormat::Dicom))
            .build()
            .unwrap();
        let graph = study.workflow(&["wm_seg"]).unwrap();
        assert_execution_order(&graph, &["reference_segmentation_pipeline"]);

        // The base producer no longer owns the spec.
        let err = study.pipeline("segmentation_pipeline").unwrap_err();
        assert_error_code(&err, codes::FOREIGN_OUTPUT);
    }

    #[test]
    fn test_unknown_input_is_spec_not_found() {
        let definition = StudyDefinition::builder("coreg")
            .extends(mri())
            .data(DataSpec::dataset("coreg_brain", FileFormat::NiftiGz).produced_by("coreg_pipeline"))
            .pipeline("coreg_pipeline", |ctx: &PipelineContext<'_>| {
                ctx.create_pipeline()
                    .input("preproc")?
                    .input("ref_brain")?
                    .output("coreg_brain")?
                    .build()
            })
            .build()
            .unwrap();
        let study = Study::builder(definition, "subject").build().unwrap();
        let err = study.pipeline("coreg_pipeline").unwrap_err();
        assert_spec_not_found(&err, "ref_brain");
    }

    #[test]
    fn test_own_beats_later_sub_study_beats_earlier() {
        let definition = StudyDefinition::builder("ordered")
            .extends(anatomy())
            .sub_study("a", mri(), [("shared", "preproc")])
            .sub_study("b", mri(), [("shared", "wm_seg")])
            .build()
            .unwrap();
        assert_produced_by(&definition, "shared", "b_segmentation_pipeline");

        let own = StudyDefinition::builder("own")
            .extends(definition)
            .data(DataSpec::dataset("shared", FileFormat::NiftiGz).produced_by("own_pipeline"))
            .pipeline("own_pipeline", passthrough_pipeline(&["primary"], &["shared"]))
            .build()
            .unwrap();
        assert_produced_by(&own, "shared", "own_pipeline");
        assert_produced_by(&own, "preproc", "preproc_pipeline");
    }

    #[test]
    fn test_sub_study_pipelines_resolve_in_container_names() {
        let multi = StudyDefinition::builder("multi")
            .sub_study("t1_0", mri(), std::iter::empty::<(&str, &str)>())
            .sub_study("t1_1", mri(), std::iter::empty::<(&str, &str)>())
            .build()
            .unwrap();
        let study = Study::builder(multi, "subject")
            .input(InputMatch::dataset("t1_0_primary", "t1_first", FileFormat::Dicom))
            .input(InputMatch::dataset("t1_1_primary", "t1_second", FileFormat::Dicom))
            .option("t1_1_bet_frac", 0.3)
            .build()
            .unwrap();

        let graph = study.workflow(&["t1_0_wm_seg", "t1_1_motion_mats"]).unwrap();
        assert_execution_order(
            &graph,
            &[
                "t1_0_preproc_pipeline",
                "t1_0_segmentation_pipeline",
                "t1_1_preproc_pipeline",
                "t1_1_motion_mats_pipeline",
            ],
        );
        let pipeline = graph.pipeline("t1_1_motion_mats_pipeline").unwrap();
        assert_eq!(pipeline.input_names().collect::<Vec<_>>(), vec!["t1_1_preproc"]);
        assert_eq!(pipeline.options().float("t1_1_bet_frac").unwrap(), 0.3);
    }

    #[test]
    fn test_unconnected_tool_port_is_fatal() {
        let definition = StudyDefinition::builder("broken")
            .extends(anatomy())
            .data(DataSpec::dataset("brain", FileFormat::NiftiGz).produced_by("bet_pipeline"))
            .pipeline("bet_pipeline", |ctx: &PipelineContext<'_>| {
                let bet = ToolInterface::builtin("bet")
                    .input("in_file")
                    .input("frac")
                    .output("out_file");
                ctx.create_pipeline()
                    .input("preproc")?
                    .output("brain")?
                    .add_node(ToolNode::new("bet", bet))?
                    .connect_input("preproc", "bet", "in_file")?
                    .connect_output("brain", "bet", "out_file")?
                    .build()
            })
            .build()
            .unwrap();
        let study = Study::builder(definition, "subject").build().unwrap();
        let err = study.pipeline("bet_pipeline").unwrap_err();
        assert_error_code(&err, codes::UNCONNECTED);
        assert!(err.to_string().contains("frac"));
    }

    #[test]
    fn test_missing_scan_surfaces_no_producer() {
        let study = Study::builder(multi(), "subject").build().unwrap();
        let err = study.workflow(&["a_wm_seg"]).unwrap_err();
        assert!(matches!(err, NiflowError::Wiring(_)));
        assert_error_code(&err, codes::NO_PRODUCER);
        assert!(err.to_string().contains("a_primary"));
    }
}
